use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{hash_password, TokenCodec};
use crate::error::AppError;
use crate::logger::RequestLogger;
use crate::middleware::AccessGate;
use crate::routes::{
    am_i_admin, change_password, create_user, get_users, health_check, login, refresh_token,
};
use crate::store::{NewUser, Role, SessionStore, UserStore};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@localhost";

/// Seed the default admin account on an empty store. Registration is
/// admin-gated, so without this there would be no way to create the
/// first user.
///
/// Ships with password "admin"; change it after the first login.
pub async fn ensure_default_admin(users: &dyn UserStore) -> Result<(), AppError> {
    if users
        .find_by_username(DEFAULT_ADMIN_USERNAME)
        .await?
        .is_some()
        || users.find_by_email(DEFAULT_ADMIN_EMAIL).await?.is_some()
    {
        return Ok(());
    }

    let password_hash = hash_password("admin")?;
    let admin = users
        .insert(NewUser {
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            email: DEFAULT_ADMIN_EMAIL.to_string(),
            password_hash,
            role: Role::Admin,
        })
        .await?;

    tracing::info!(user_id = admin.id, "Default admin account created");

    Ok(())
}

pub fn run(
    listener: TcpListener,
    codec: TokenCodec,
    users: Arc<dyn UserStore>,
    sessions: Arc<dyn SessionStore>,
) -> Result<Server, std::io::Error> {
    let codec_data = web::Data::new(codec.clone());
    let users_data: web::Data<dyn UserStore> = web::Data::from(users.clone());
    let sessions_data: web::Data<dyn SessionStore> = web::Data::from(sessions.clone());

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(RequestLogger)

            // Shared state
            .app_data(codec_data.clone())
            .app_data(users_data.clone())
            .app_data(sessions_data.clone())

            // Public routes (no token required)
            .route("/health_check", web::get().to(health_check))
            .route("/user/login", web::post().to(login))
            .route("/user/token/refresh", web::post().to(refresh_token))
            .route("/user/change-password", web::post().to(change_password))

            // Bearer-gated routes
            .service(
                web::resource("/user/getusers")
                    .wrap(AccessGate::bearer(
                        codec.clone(),
                        users.clone(),
                        sessions.clone(),
                    ))
                    .route(web::get().to(get_users)),
            )

            // Admin-gated routes
            .service(
                web::resource("/user/create-user")
                    .wrap(AccessGate::admin(
                        codec.clone(),
                        users.clone(),
                        sessions.clone(),
                    ))
                    .route(web::post().to(create_user)),
            )
            .service(
                web::resource("/user/am-i-admin")
                    .wrap(AccessGate::admin(
                        codec.clone(),
                        users.clone(),
                        sessions.clone(),
                    ))
                    .route(web::get().to(am_i_admin)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::verify_password;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_default_admin_created() {
        let store = MemoryStore::new();

        ensure_default_admin(&store).await.unwrap();

        let admin = store
            .find_by_username("admin")
            .await
            .unwrap()
            .expect("admin should exist");
        assert_eq!(admin.role, Role::Admin);
        assert_eq!(admin.email, "admin@localhost");
        assert!(verify_password("admin", &admin.password_hash).unwrap());
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let store = MemoryStore::new();

        ensure_default_admin(&store).await.unwrap();
        ensure_default_admin(&store).await.unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_seeding_skipped_when_admin_username_taken() {
        let store = MemoryStore::new();
        store
            .insert(NewUser {
                username: "admin".to_string(),
                email: "someone@else.com".to_string(),
                password_hash: hash_password("pw").unwrap(),
                role: Role::Customer,
            })
            .await
            .unwrap();

        ensure_default_admin(&store).await.unwrap();

        // No second row; the name is taken even though it is not an admin.
        assert_eq!(store.list().await.unwrap().len(), 1);
    }
}
