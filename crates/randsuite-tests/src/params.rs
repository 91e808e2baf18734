//! Typed access to resolved test parameters.

use randsuite_core::{ParamValue, Params};

use crate::TestError;

/// Upper bound for parameters that set a number of histogram cells.
pub const MAX_BINS: usize = 1 << 16;

/// Typed getters over a resolved [`Params`] map.
///
/// A missing name or a value of the wrong shape becomes
/// [`TestError::InvalidParameter`], so the test reports a sentinel outcome
/// instead of aborting the batch.
pub trait ParamsExt {
    fn value(&self, name: &str) -> Result<ParamValue, TestError>;

    fn usize(&self, name: &str) -> Result<usize, TestError> {
        match self.value(name)? {
            ParamValue::Int(v) if v >= 0 => Ok(v as usize),
            ParamValue::Float(v) if v >= 0.0 && v.fract() == 0.0 && v < 1e15 => Ok(v as usize),
            other => Err(invalid(name, format!("expected a non-negative integer, got {other}"))),
        }
    }

    /// Like [`usize`](Self::usize) but rejects values below `min`.
    fn usize_at_least(&self, name: &str, min: usize) -> Result<usize, TestError> {
        let v = self.usize(name)?;
        if v < min {
            return Err(invalid(name, format!("must be at least {min}, got {v}")));
        }
        Ok(v)
    }

    /// Like [`usize`](Self::usize) but limited to `min..=max`. Used for
    /// parameters that size an allocation.
    fn usize_in(&self, name: &str, min: usize, max: usize) -> Result<usize, TestError> {
        let v = self.usize_at_least(name, min)?;
        if v > max {
            return Err(invalid(name, format!("must be at most {max}, got {v}")));
        }
        Ok(v)
    }

    fn u64(&self, name: &str) -> Result<u64, TestError> {
        self.usize(name).map(|v| v as u64)
    }

    fn f64(&self, name: &str) -> Result<f64, TestError> {
        match self.value(name)? {
            ParamValue::Int(v) => Ok(v as f64),
            ParamValue::Float(v) if v.is_finite() => Ok(v),
            other => Err(invalid(name, format!("expected a number, got {other}"))),
        }
    }

    fn flag(&self, name: &str) -> Result<bool, TestError> {
        match self.value(name)? {
            ParamValue::Bool(v) => Ok(v),
            ParamValue::Int(0) => Ok(false),
            ParamValue::Int(1) => Ok(true),
            other => Err(invalid(name, format!("expected true or false, got {other}"))),
        }
    }
}

impl ParamsExt for Params {
    fn value(&self, name: &str) -> Result<ParamValue, TestError> {
        self.get(name)
            .copied()
            .ok_or_else(|| invalid(name, "missing".to_string()))
    }
}

fn invalid(name: &str, reason: String) -> TestError {
    TestError::InvalidParameter {
        name: name.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Params {
        let mut p = Params::new();
        p.insert("n".into(), ParamValue::Int(10));
        p.insert("neg".into(), ParamValue::Int(-3));
        p.insert("big".into(), ParamValue::Float(1e6));
        p.insert("half".into(), ParamValue::Float(0.5));
        p.insert("on".into(), ParamValue::Bool(true));
        p
    }

    #[test]
    fn test_integers() {
        let p = params();
        assert_eq!(p.usize("n").unwrap(), 10);
        assert_eq!(p.usize("big").unwrap(), 1_000_000);
        assert!(p.usize("neg").is_err());
        assert!(p.usize("half").is_err());
        assert!(p.usize("on").is_err());
        assert!(p.usize_at_least("n", 11).is_err());
        assert_eq!(p.usize_in("n", 2, 10).unwrap(), 10);
        let err = p.usize_in("big", 2, 4096).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid parameter 'big': must be at most 4096, got 1000000"
        );
    }

    #[test]
    fn test_floats_and_flags() {
        let p = params();
        assert_eq!(p.f64("n").unwrap(), 10.0);
        assert_eq!(p.f64("half").unwrap(), 0.5);
        assert!(p.flag("on").unwrap());
        assert!(p.flag("half").is_err());
    }

    #[test]
    fn test_missing_parameter() {
        let err = params().usize("absent").unwrap_err();
        assert_eq!(err.to_string(), "invalid parameter 'absent': missing");
    }
}
