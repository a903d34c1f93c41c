//! Phase strategies.
//!
//! Each phase of the pipeline is a closed enum of the variants that can run
//! it. Variants are resolved by name from the Test Session before the
//! pipeline starts, so an unknown name is rejected up front.

macro_rules! strategy_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $phase:literal, [$($variant:ident),+ $(,)?]
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Phase label used in log lines.
            pub const PHASE: &'static str = $phase;

            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            pub fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant)),+
                }
            }

            /// Resolve a variant from its configured name.
            pub fn from_name(name: &str) -> Result<Self, $crate::errors::AppError> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.name() == name)
                    .ok_or_else(|| {
                        $crate::errors::AppError::Configuration(format!(
                            "Unknown {} strategy \"{name}\", expected one of: {}",
                            $phase,
                            Self::ALL.iter().map(|v| v.name()).collect::<Vec<_>>().join(", ")
                        ))
                    })
            }

            fn log_invoked(&self, operation: &str) {
                tracing::info!(
                    phase = $phase,
                    strategy = self.name(),
                    operation,
                    "Strategy invoked"
                );
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

pub mod emissary_authentication;
pub mod post_scanning;
pub mod reporting;
pub mod scanners;
pub mod scanning;
pub mod sites_tree_population;
pub mod spider;
pub mod sut_authentication;

pub use emissary_authentication::EmissaryAuthentication;
pub use post_scanning::PostScanning;
pub use reporting::Reporting;
pub use scanners::Scanners;
pub use scanning::Scanning;
pub use sites_tree_population::SitesTreePopulation;
pub use spider::Spider;
pub use sut_authentication::SitesTreeSutAuthentication;
