//! Spend authorization seam.
//!
//! Signature generation and verification live outside this crate; the
//! ledger only asks whether an unlock script satisfies an output's locking
//! script. A real deployment plugs a signing service in behind
//! [`ScriptVerifier`]; the default implementation is the exact-match rule.

/// Decides whether an input is allowed to spend an output.
///
/// `context` carries whatever message bytes the authorization scheme signs
/// over (this crate passes the spending transaction's signing context).
pub trait ScriptVerifier {
    fn verify(&self, script_pubkey: &str, script_sig: &str, context: &[u8]) -> bool;
}

/// Authorizes a spend when the unlock script equals the locking script.
///
/// Stands in for a signature scheme: the "address" is the secret. Useful
/// for tests and simulations; not for anything that holds value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatchVerifier;

impl ScriptVerifier for ExactMatchVerifier {
    fn verify(&self, script_pubkey: &str, script_sig: &str, _context: &[u8]) -> bool {
        script_sig == script_pubkey
    }
}
