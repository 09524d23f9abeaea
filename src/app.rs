/*!
HTTP proxy that confines every query passing through it to the caller's scope.

Requests are authenticated with [`ScopeResolver`], every `query` and `match[]` parameter is rewritten with [`parse_and_scope`](crate::parse_and_scope), and the result is forwarded to the backend.
Queries that can not be confined never reach the backend.
*/

mod auth;
mod error;
mod handlers;
mod rewrite;
mod state;

pub use auth::{
	Credentials,
	HttpScopeResolver,
	Identity,
	ResolveError,
	ScopeResolver,
	StaticScopeResolver,
};
pub use error::AppError;
pub use handlers::router;
pub use rewrite::{rewrite_params, Endpoint, Rewritten};
pub use state::{AppConfig, AppState};
