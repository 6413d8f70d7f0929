//! Bridge state trait and macro.

use crate::config::BridgeConfig;
use crate::gatekeeper::RouteRules;
use crate::session::SessionMaterializer;

/// Trait for state types that give handlers and middleware access to the bridge.
pub trait HasBridgeBackend {
    type Sessions: SessionMaterializer;

    fn config(&self) -> &BridgeConfig;
    fn sessions(&self) -> &Self::Sessions;
    fn routes(&self) -> &RouteRules;
}

/// Macro to implement `HasBridgeBackend` for state structs with the standard fields.
///
/// The struct must have these fields:
/// - `config: Arc<BridgeConfig>`
/// - `sessions: <materializer type>`
/// - `routes: Arc<RouteRules>`
///
/// # Example
/// ```ignore
/// use crate::impl_has_bridge_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub config: Arc<BridgeConfig>,
///     pub sessions: SqliteSessions,
///     pub routes: Arc<RouteRules>,
/// }
///
/// impl_has_bridge_backend!(MyState, SqliteSessions);
/// ```
#[macro_export]
macro_rules! impl_has_bridge_backend {
    ($state_type:ty, $sessions:ty) => {
        impl $crate::auth::HasBridgeBackend for $state_type {
            type Sessions = $sessions;

            fn config(&self) -> &$crate::config::BridgeConfig {
                &self.config
            }
            fn sessions(&self) -> &$sessions {
                &self.sessions
            }
            fn routes(&self) -> &$crate::gatekeeper::RouteRules {
                &self.routes
            }
        }
    };
}
