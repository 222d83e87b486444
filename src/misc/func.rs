use rand::Rng;
use std::ops::AddAssign;

/// Safely compute `log(sum(exp(xs))`
///
/// Returns negative infinity if every entry is negative infinity.
///
/// # Example
///
/// ```rust
/// # use mixem::misc::logsumexp;
/// let xs = [0.1_f64.ln(), 0.2_f64.ln(), 0.7_f64.ln()];
/// assert!(logsumexp(&xs).abs() < 1E-12);
///
/// let zs = [f64::NEG_INFINITY, f64::NEG_INFINITY];
/// assert_eq!(logsumexp(&zs), f64::NEG_INFINITY);
/// ```
///
/// # Panics
///
/// Panics if `xs` is empty.
pub fn logsumexp(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        panic!("Empty container");
    } else if xs.len() == 1 {
        xs[0]
    } else {
        let maxval = xs.iter().fold(f64::NEG_INFINITY, |m, &x| m.max(x));
        if maxval == f64::NEG_INFINITY {
            return f64::NEG_INFINITY;
        }
        xs.iter().fold(0.0, |acc, x| acc + (x - maxval).exp()).ln() + maxval
    }
}

/// Cumulative sum of `xs`
///
/// # Example
///
/// ```rust
/// # use mixem::misc::cumsum;
/// let xs: Vec<i32> = vec![1, 1, 2, 1];
/// assert_eq!(cumsum(&xs), vec![1, 2, 4, 5]);
/// ```
pub fn cumsum<T>(xs: &[T]) -> Vec<T>
where
    T: AddAssign + Copy + Default,
{
    xs.iter()
        .scan(T::default(), |acc, &x| {
            *acc += x;
            Some(*acc)
        })
        .collect()
}

/// Index of the largest value. Ties go to the first occurrence; NaN
/// entries are never selected unless every entry is NaN.
///
/// # Example
///
/// ```rust
/// # use mixem::misc::argmax;
/// assert_eq!(argmax(&[0.1, 0.7, 0.7, 0.2]), Some(1));
/// assert_eq!(argmax(&[]), None);
/// ```
pub fn argmax(xs: &[f64]) -> Option<usize> {
    if xs.is_empty() {
        return None;
    }
    let mut best = 0;
    for (ix, &x) in xs.iter().enumerate().skip(1) {
        if x > xs[best] || (xs[best].is_nan() && !x.is_nan()) {
            best = ix;
        }
    }
    Some(best)
}

/// Draw `n` indices in proportion to their `weights`
///
/// # Panics
///
/// Panics if `weights` is empty or if the weights do not permit a draw
/// (e.g. they are all zero).
pub fn pflip(weights: &[f64], n: usize, rng: &mut impl Rng) -> Vec<usize> {
    if weights.is_empty() {
        panic!("Empty container");
    }
    let cws: Vec<f64> = cumsum(weights);
    let scale: f64 = cws[cws.len() - 1];
    let u = rand::distributions::Uniform::new(0.0, 1.0);

    (0..n)
        .map(|_| {
            let r = rng.sample(u) * scale;
            match cws.iter().position(|&w| w > r) {
                Some(ix) => ix,
                None => panic!("Could not draw from {:?}", weights),
            }
        })
        .collect()
}
