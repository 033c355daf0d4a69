//! Crossover and mutation operators for evolutionary search.

use super::candidate::{
    ArchitectureCandidate, DROPOUT_RATES, L2_RATES, LEARNING_RATES, MAX_LAYERS, MAX_NEURONS,
    MIN_NEURONS, pick,
};
use netlens_core::{Activation, Optimizer};
use rand::Rng;

/// Uniform crossover: every gene comes from a parent chosen by coin flip.
pub fn crossover<R: Rng>(
    a: &ArchitectureCandidate,
    b: &ArchitectureCandidate,
    rng: &mut R,
) -> ArchitectureCandidate {
    let from = |rng: &mut R| if rng.gen_bool(0.5) { a } else { b };
    let layers = from(rng).layers().to_vec();
    let activation = from(rng).activation();
    let optimizer = from(rng).optimizer();
    let learning_rate = from(rng).learning_rate();
    let dropout_rate = from(rng).dropout_rate();
    let l2_regularization = from(rng).l2_regularization();
    ArchitectureCandidate::new(layers)
        .with_activation(activation)
        .with_optimizer(optimizer)
        .with_learning_rate(learning_rate)
        .with_dropout_rate(dropout_rate)
        .with_l2_regularization(l2_regularization)
}

/// Replace each gene independently with probability `rate`.
pub fn mutate<R: Rng>(
    candidate: &ArchitectureCandidate,
    rate: f64,
    rng: &mut R,
) -> ArchitectureCandidate {
    let mut child = candidate.clone();
    if rng.gen_bool(rate) {
        child = child.with_layers(mutate_layers(candidate.layers(), rng));
    }
    if rng.gen_bool(rate) {
        child = child.with_activation(pick(rng, &Activation::ALL));
    }
    if rng.gen_bool(rate) {
        child = child.with_optimizer(pick(rng, &Optimizer::ALL));
    }
    if rng.gen_bool(rate) {
        child = child.with_learning_rate(pick(rng, &LEARNING_RATES));
    }
    if rng.gen_bool(rate) {
        child = child.with_dropout_rate(pick(rng, &DROPOUT_RATES));
    }
    if rng.gen_bool(rate) {
        child = child.with_l2_regularization(pick(rng, &L2_RATES));
    }
    child
}

/// Drop the last layer, append a half-width layer, or resize one layer.
///
/// Operations that would leave the depth range are no-ops.
pub fn mutate_layers<R: Rng>(layers: &[usize], rng: &mut R) -> Vec<usize> {
    let mut layers = layers.to_vec();
    match rng.gen_range(0..3) {
        0 => {
            if layers.len() > 1 {
                layers.pop();
            }
        }
        1 => {
            if layers.len() < MAX_LAYERS {
                let last = layers.last().copied().unwrap_or(MAX_NEURONS);
                layers.push((last / 2).max(MIN_NEURONS));
            }
        }
        _ => {
            if !layers.is_empty() {
                let index = rng.gen_range(0..layers.len());
                layers[index] = rng.gen_range(MIN_NEURONS..=MAX_NEURONS);
            }
        }
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use netlens_core::seeded_rng;

    fn parents() -> (ArchitectureCandidate, ArchitectureCandidate) {
        let a = ArchitectureCandidate::new(vec![16, 8])
            .with_activation(Activation::Relu)
            .with_optimizer(Optimizer::Adam)
            .with_learning_rate(0.001);
        let b = ArchitectureCandidate::new(vec![4])
            .with_activation(Activation::Tanh)
            .with_optimizer(Optimizer::Sgd)
            .with_learning_rate(0.1)
            .with_dropout_rate(0.3)
            .with_l2_regularization(0.01);
        (a, b)
    }

    #[test]
    fn test_crossover_genes_come_from_parents() {
        let (a, b) = parents();
        let mut rng = seeded_rng(Some(17));
        for _ in 0..100 {
            let child = crossover(&a, &b, &mut rng);
            assert!(child.layers() == a.layers() || child.layers() == b.layers());
            assert!(child.activation() == a.activation() || child.activation() == b.activation());
            assert!(
                child.learning_rate() == a.learning_rate()
                    || child.learning_rate() == b.learning_rate()
            );
            assert!(
                child.dropout_rate() == a.dropout_rate() || child.dropout_rate() == b.dropout_rate()
            );
        }
    }

    #[test]
    fn test_crossover_leaves_parents_untouched() {
        let (a, b) = parents();
        let (a0, b0) = (a.clone(), b.clone());
        let mut rng = seeded_rng(Some(3));
        let _ = crossover(&a, &b, &mut rng);
        assert_eq!(a, a0);
        assert_eq!(b, b0);
    }

    #[test]
    fn test_zero_rate_mutation_is_identity() {
        let (a, _) = parents();
        let mut rng = seeded_rng(Some(5));
        assert_eq!(mutate(&a, 0.0, &mut rng), a);
    }

    #[test]
    fn test_full_rate_mutation_stays_in_space() {
        let (a, _) = parents();
        let mut rng = seeded_rng(Some(6));
        for _ in 0..200 {
            let m = mutate(&a, 1.0, &mut rng);
            assert!((1..=MAX_LAYERS).contains(&m.layers().len()));
            assert!(m.layers().iter().all(|l| (MIN_NEURONS..=MAX_NEURONS).contains(l)));
            assert!(LEARNING_RATES.contains(&m.learning_rate()));
        }
    }

    #[test]
    fn test_layer_mutation_bounds() {
        let mut rng = seeded_rng(Some(8));
        let mut saw_drop = false;
        let mut saw_append = false;
        for _ in 0..200 {
            let single = mutate_layers(&[8], &mut rng);
            assert!(!single.is_empty());
            let full = mutate_layers(&[32, 16, 8, 4], &mut rng);
            assert!(full.len() <= MAX_LAYERS);
            let two = mutate_layers(&[8, 6], &mut rng);
            saw_drop |= two == vec![8];
            saw_append |= two == vec![8, 6, 3];
        }
        assert!(saw_drop);
        assert!(saw_append);
    }
}
