use semver::Version;

use crate::error::AnalyzerError;

/// Program-format schema version this build writes and reads.
pub const FORMAT_VERSION: &str = "1.2.0";

/// Accept any 1.x document. A major bump means the statement vocabulary or
/// the reference encoding changed incompatibly.
pub fn check_version(version: &str) -> Result<Version, AnalyzerError> {
    let parsed = Version::parse(version).map_err(|e| AnalyzerError::UnsupportedVersion {
        version: version.to_string(),
        reason: format!("not a semantic version: {e}"),
    })?;
    if parsed.major != 1 {
        return Err(AnalyzerError::UnsupportedVersion {
            version: version.to_string(),
            reason: format!("supported major version is 1, found {}", parsed.major),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_any_one_x() {
        assert!(check_version("1.0.0").is_ok());
        assert!(check_version("1.9.3").is_ok());
    }

    #[test]
    fn rejects_other_majors_and_garbage() {
        assert!(check_version("2.0.0").is_err());
        assert!(check_version("one").is_err());
    }
}
