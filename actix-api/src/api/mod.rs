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

pub mod login;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Home page: greeting when authenticated, login link otherwise
        .service(web::resource("/").route(web::get().to(login::home)))
        // Redirect out to the provider's consent screen
        .service(web::resource("/login").route(web::get().to(login::login)))
        // Provider redirects back here with code + state
        .service(web::resource("/login/callback").route(web::get().to(login::login_callback)))
        // Clear the session (login required)
        .service(web::resource("/logout").route(web::get().to(login::logout)));
}
