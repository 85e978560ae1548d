use std::f64::consts::PI;

use rand::Rng;

/// Supplier of uniform reals in `[0, 1)`.
pub trait UniformSource {
    fn next_uniform(&mut self) -> f64;
}

impl<R: Rng> UniformSource for R {
    fn next_uniform(&mut self) -> f64 {
        self.r#gen::<f64>()
    }
}

// Box-Muller. Zero draws are redrawn so `ln(u)` stays finite.
pub fn standard_normal<U: UniformSource + ?Sized>(source: &mut U) -> f64 {
    let u = nonzero_uniform(source);
    let v = nonzero_uniform(source);
    (-2.0 * u.ln()).sqrt() * (2.0 * PI * v).cos()
}

fn nonzero_uniform<U: UniformSource + ?Sized>(source: &mut U) -> f64 {
    loop {
        let draw = source.next_uniform();
        if draw != 0.0 {
            return draw;
        }
    }
}
