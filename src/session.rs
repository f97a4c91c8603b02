use rocket::{
    Outcome,
    http::{Cookie, Cookies},
    request::{self, FromRequest, Request},
};

use crate::backend::Identity;
use crate::model::User;


/// Private cookie holding the signed-in user's identity-provider id.
pub const SESSION_COOKIE: &'static str = "dog_map_session";


/// The signed-in user of a request, if any. Never fails as a guard so that
/// handlers decide how to treat anonymous requests.
pub struct Session(Option<User>);

impl Session {
    pub fn start(cookies: &mut Cookies, user_id: &str) {
        let mut cookie = Cookie::new(SESSION_COOKIE, user_id.to_owned());
        cookie.set_path("/");
        cookies.add_private(cookie);
    }

    pub fn end(cookies: &mut Cookies) {
        cookies.remove_private(Cookie::named(SESSION_COOKIE));
    }
}

impl<'a, 'r> FromRequest<'a, 'r> for Session {
    type Error = ();

    fn from_request(request: &'a Request<'r>) -> request::Outcome<Self, Self::Error> {
        let user = request.cookies()
            .get_private(SESSION_COOKIE)
            .map(|cookie| cookie.value().trim().to_owned())
            .filter(|id| !id.is_empty())
            .map(|id| User { id });

        Outcome::Success(Session(user))
    }
}

impl Identity for Session {
    fn current_user(&self) -> Option<User> {
        self.0.clone()
    }
}
