use std::fmt::Display;

#[derive(Debug)]
pub enum FaultMeshError {
    /// Malformed surface, mesh or input file contents
    Format(String),
    /// A discontinuity segment that does not resolve to a conforming pair of elements
    Topology { segment: usize, message: String },
    /// Missing or inconsistent run configuration
    Configuration(String),
    Mesher(String),
    Writer(String),
}

impl Display for FaultMeshError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (err_name, value) = match self {
            FaultMeshError::Format(v) => ("Format", v),
            FaultMeshError::Configuration(v) => ("Configuration", v),
            FaultMeshError::Mesher(v) => ("Mesher", v),
            FaultMeshError::Writer(v) => ("Writer", v),
            FaultMeshError::Topology { segment, message } => {
                return write!(f, "Topology error at segment {}: {}", segment, message);
            }
        };

        write!(f, "{} error: {}", err_name, value)
    }
}

impl std::error::Error for FaultMeshError {}

impl From<std::io::Error> for FaultMeshError {
    fn from(err: std::io::Error) -> Self {
        FaultMeshError::Writer(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failing_segment() {
        let err = FaultMeshError::Topology {
            segment: 7,
            message: "found 3 adjacent elements".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "Topology error at segment 7: found 3 adjacent elements"
        );
    }

    #[test]
    fn display_uses_kind_prefix() {
        let err = FaultMeshError::Format("Not a valid OFF file".to_owned());
        assert_eq!(err.to_string(), "Format error: Not a valid OFF file");
    }
}
