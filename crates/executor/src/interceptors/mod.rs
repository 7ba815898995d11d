//! Standard interceptors
//!
//! | Interceptor | Injects |
//! |-------------|---------|
//! | [`ConfigurationInitializer`] | `Configuration`, evaluated against the environment |
//! | [`SecretsInitializer`] | `SecretsManager` |
//! | [`ServiceInitializer`] | `ChangeFileFactory`, `StateService`, `ChangeService`, `LockService` |

mod configuration;
mod secrets;
mod services;

pub use configuration::ConfigurationInitializer;
pub use secrets::SecretsInitializer;
pub use services::ServiceInitializer;
