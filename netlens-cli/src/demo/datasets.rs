//! Seeded two-class toy datasets inside the default `[-6, 6]` plot.

use netlens_core::{Point, standard_normal};
use rand::Rng;
use rand::seq::SliceRandom;

const RADIUS: f64 = 5.0;

/// Shape of a generated dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DatasetKind {
    /// Class 1 inside a disc, class 0 on a surrounding ring.
    Circle,
    /// Class 1 in the first and third quadrants.
    Xor,
    /// Two Gaussian blobs.
    Gauss,
}

/// Generate `n` points; `noise` in `[0, 1]` blurs the class boundary.
pub fn generate<R: Rng>(kind: DatasetKind, n: usize, noise: f64, rng: &mut R) -> Vec<Point> {
    let noise = noise.clamp(0.0, 1.0);
    match kind {
        DatasetKind::Circle => circle(n, noise, rng),
        DatasetKind::Xor => xor(n, noise, rng),
        DatasetKind::Gauss => gauss(n, noise, rng),
    }
}

fn circle<R: Rng>(n: usize, noise: f64, rng: &mut R) -> Vec<Point> {
    let mut points = Vec::with_capacity(n);
    for i in 0..n {
        let inside = i % 2 == 0;
        let r = if inside {
            rng.gen_range(0.0..RADIUS * 0.5)
        } else {
            rng.gen_range(RADIUS * 0.7..RADIUS)
        };
        let angle = rng.gen_range(0.0..std::f64::consts::TAU);
        let x = r * angle.cos() + rng.gen_range(-RADIUS..RADIUS) * noise * 0.5;
        let y = r * angle.sin() + rng.gen_range(-RADIUS..RADIUS) * noise * 0.5;
        let label = usize::from((x * x + y * y).sqrt() < RADIUS * 0.5 + 0.5);
        points.push(Point::new(x, y, label));
    }
    points
}

fn xor<R: Rng>(n: usize, noise: f64, rng: &mut R) -> Vec<Point> {
    const PADDING: f64 = 0.3;
    (0..n)
        .map(|_| {
            let mut x = rng.gen_range(-RADIUS..RADIUS);
            let mut y = rng.gen_range(-RADIUS..RADIUS);
            x += if x > 0.0 { PADDING } else { -PADDING };
            y += if y > 0.0 { PADDING } else { -PADDING };
            let label = usize::from(x * y >= 0.0);
            let jitter = RADIUS * noise;
            Point::new(
                x + rng.gen_range(-1.0..1.0) * jitter,
                y + rng.gen_range(-1.0..1.0) * jitter,
                label,
            )
        })
        .collect()
}

fn gauss<R: Rng>(n: usize, noise: f64, rng: &mut R) -> Vec<Point> {
    let sigma = 0.5 + 3.5 * noise;
    (0..n)
        .map(|i| {
            let label = i % 2;
            let centre = if label == 1 { 2.0 } else { -2.0 };
            let x = centre + standard_normal(rng) * sigma;
            let y = centre + standard_normal(rng) * sigma;
            Point::new(x, y, label)
        })
        .collect()
}

/// Shuffle and split off the last `validation_ratio` share as validation points.
///
/// Both halves are non-empty whenever `points` holds at least two entries.
pub fn split<R: Rng>(
    mut points: Vec<Point>,
    validation_ratio: f64,
    rng: &mut R,
) -> (Vec<Point>, Vec<Point>) {
    points.shuffle(rng);
    let n = points.len();
    let mut held_out = (n as f64 * validation_ratio.clamp(0.0, 1.0)).round() as usize;
    if n >= 2 {
        held_out = held_out.clamp(1, n - 1);
    }
    let validation = points
        .split_off(n - held_out)
        .into_iter()
        .map(Point::validation)
        .collect();
    (points, validation)
}
