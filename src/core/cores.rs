use crate::domain::model::Parameters;
use std::thread;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreResolution {
    pub num_cpu_cores: usize,
    pub available_cpu_cores: usize,
    pub used_default: bool,
}

/// Logical cores of the host, 1 when the platform cannot tell.
pub fn available_cpu_cores() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Replaces `num_cpu_cores == 0` with `available`. Explicit requests are kept,
/// even above `available`.
pub fn resolve_cpu_cores(parameters: &mut Parameters, available: usize) -> CoreResolution {
    let used_default = parameters.num_cpu_cores == 0;
    if used_default {
        parameters.num_cpu_cores = available;
    } else if parameters.num_cpu_cores > available {
        tracing::warn!(
            "Requested {} CPU cores but only {} are available",
            parameters.num_cpu_cores,
            available
        );
    }

    CoreResolution {
        num_cpu_cores: parameters.num_cpu_cores,
        available_cpu_cores: available,
        used_default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_cores_uses_all_available() {
        let mut params = Parameters::new("a.las");
        let resolution = resolve_cpu_cores(&mut params, 12);

        assert_eq!(params.num_cpu_cores, 12);
        assert!(resolution.used_default);
        assert_eq!(resolution.available_cpu_cores, 12);
    }

    #[test]
    fn test_explicit_cores_are_kept() {
        let mut params = Parameters::new("a.las").with_cpu_cores(3);
        let resolution = resolve_cpu_cores(&mut params, 12);

        assert_eq!(params.num_cpu_cores, 3);
        assert!(!resolution.used_default);
    }

    #[test]
    fn test_oversubscription_is_not_clamped() {
        let mut params = Parameters::new("a.las").with_cpu_cores(64);
        let resolution = resolve_cpu_cores(&mut params, 8);

        assert_eq!(resolution.num_cpu_cores, 64);
        assert_eq!(params.num_cpu_cores, 64);
    }

    #[test]
    fn test_host_reports_at_least_one_core() {
        assert!(available_cpu_cores() >= 1);
    }
}
