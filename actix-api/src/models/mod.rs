/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

pub mod session;
pub mod user;

pub use session::Session;
pub use user::User;

/// Environment-sourced OAuth configuration, read once at startup.
pub struct AppConfig {
    pub oauth_client_id: String,
    pub oauth_secret: String,
    pub oauth_redirect_url: String,
    pub oauth_discovery_url: String,
}
