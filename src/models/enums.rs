use serde::{Deserialize, Serialize};

use super::ValidationError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ValidationError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

pub(crate) use str_enum;

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Other => "other",
    Unspecified => "unspecified",
});

impl Default for Gender {
    fn default() -> Self {
        Gender::Unspecified
    }
}

str_enum!(TurnRole {
    User => "user",
    Assistant => "assistant",
});

impl TurnRole {
    /// Capitalized label used in prompts and exported transcripts.
    pub fn label(&self) -> &'static str {
        match self {
            TurnRole::User => "User",
            TurnRole::Assistant => "Assistant",
        }
    }
}

str_enum!(MetricKind {
    Glucose => "glucose",
    BloodPressure => "blood_pressure",
    Asthma => "asthma",
});

impl MetricKind {
    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::Glucose => "Blood Glucose",
            MetricKind::BloodPressure => "Blood Pressure",
            MetricKind::Asthma => "Asthma Severity",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Glucose => "mg/dL",
            MetricKind::BloodPressure => "mmHg",
            MetricKind::Asthma => "/10",
        }
    }
}

str_enum!(BmiCategory {
    Underweight => "underweight",
    Normal => "normal",
    Overweight => "overweight",
    Obese => "obese",
});
