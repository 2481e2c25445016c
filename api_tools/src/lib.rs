use actix_web::web;

pub mod routes {
    pub mod tool;
}

pub mod services {
    pub mod processor;
    pub mod tool;
}

mod dtos {
    pub(crate) mod tool;
}

/// Catalog and metered processing for dashboard users (JWT).
pub fn mount_tools() -> actix_web::Scope {
    web::scope("/tools")
        .service(routes::tool::get_tools)
        .service(routes::tool::get_tool)
        .service(routes::tool::post_process)
}

/// Metered processing for API key holders.
pub fn mount_v1_tools() -> actix_web::Scope {
    web::scope("/tools").service(routes::tool::post_process_with_key)
}
