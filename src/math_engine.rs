use crate::error::{GtoError, GtoResult};

/// Share of the final pot a caller puts in: `to_call / (pot + to_call)`,
/// where `pot` already includes the bet being faced.
pub fn pot_odds(pot: f64, to_call: f64) -> GtoResult<f64> {
    if pot < 0.0 || to_call < 0.0 {
        return Err(GtoError::InvalidValue(
            "Pot and call amount must be non-negative".to_string(),
        ));
    }
    if pot + to_call <= 0.0 {
        return Ok(0.0);
    }
    Ok(to_call / (pot + to_call))
}

/// Minimum defense frequency against a bet of `bet_size` into `pot_size`.
pub fn mdf(bet_size: f64, pot_size: f64) -> GtoResult<f64> {
    if pot_size <= 0.0 {
        return Err(GtoError::InvalidValue("Pot must be positive".to_string()));
    }
    Ok(pot_size / (pot_size + bet_size))
}

/// Chance that every one of `opponents` folds when each defends at MDF.
pub fn fold_probability(bet_size: f64, pot_size: f64, opponents: usize) -> f64 {
    match mdf(bet_size, pot_size) {
        Ok(defend) => (1.0 - defend).powi(opponents as i32),
        Err(_) => 0.0,
    }
}
