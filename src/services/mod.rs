//! Business logic services.

pub mod firebase;
pub mod sync;
pub mod verifier;

pub use firebase::FirebaseClient;
pub use sync::VerificationSync;
pub use verifier::IdTokenVerifier;
