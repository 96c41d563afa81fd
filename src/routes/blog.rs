//! The blog's route table.

use crate::error::RouteError;
use crate::handlers::{api, pages};
use crate::web::{get, post, RouteTable};

pub fn blog_routes() -> Result<RouteTable, RouteError> {
    let mut t = RouteTable::new();
    t.add(get("/", pages::index).optional(&["page"]))?;
    t.add(get("/blog/{id}", pages::get_blog).required(&["id"]))?;
    t.add(get("/register", pages::register))?;
    t.add(get("/signin", pages::signin))?;
    t.add(get("/signout", pages::signout).with_request())?;
    t.add(get("/manage/blogs", pages::manage_blogs).optional(&["page"]))?;
    t.add(get("/manage/blogs/create", pages::manage_create_blog))?;

    t.add(get("/api/users", api::api_get_users))?;
    t.add(post("/api/authenticate", api::authenticate).required(&["email", "passwd"]))?;
    t.add(post("/api/users", api::api_register_user).required(&["email", "name", "passwd"]))?;
    t.add(get("/api/blogs", api::api_blogs).optional(&["page"]))?;
    t.add(get("/api/blogs/{id}", api::api_get_blog).required(&["id"]))?;
    t.add(
        post("/api/blogs", api::api_create_blog)
            .required(&["name", "summary", "content"])
            .with_request(),
    )?;
    Ok(t)
}
