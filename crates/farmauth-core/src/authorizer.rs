use crate::claims::AuthClaims;
use crate::context::RequestContext;
use crate::error::Result;
use crate::policy::AccessRequest;

/// The decision surface every business service depends on.
///
/// Services hold an `Arc<dyn Authorizer>` injected at construction; there is
/// no process-wide instance.
pub trait Authorizer: Send + Sync {
    /// `Ok(false)` is a policy denial. `Err` means the check itself was
    /// refused (throttled) and must also be treated as a denial.
    fn check_permission(&self, ctx: &RequestContext, req: &AccessRequest<'_>) -> Result<bool>;

    fn validate_token(&self, ctx: &RequestContext, token: &str) -> Result<AuthClaims>;
}
