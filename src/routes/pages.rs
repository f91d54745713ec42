use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;
use tera::Context;
use tracing::warn;

use crate::api::{CreateCertificateRequest, CreateUserRequest, QuickCreateRequest};
use crate::certificates::{self, Certificate};
use crate::session::User;
use crate::state::AppState;

pub async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.session.user().await {
        Some(_) => Redirect::to("/dashboard"),
        None => Redirect::to("/login"),
    }
}

pub async fn login_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session = state.session.snapshot().await;
    if session.user.is_some() {
        return Redirect::to("/dashboard").into_response();
    }

    let mut ctx = Context::new();
    ctx.insert("error", &session.error);
    ctx.insert("loading", &session.loading);
    render_template("login.html", ctx).into_response()
}

#[derive(Deserialize)]
pub struct LoginForm {
    cedula: String,
}

pub async fn login_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> impl IntoResponse {
    match state.session.login(&state.api, &form.cedula).await {
        Ok(_) => Redirect::to("/dashboard"),
        // the failure message waits in the session for the login page
        Err(_) => Redirect::to("/login"),
    }
}

pub async fn logout(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.session.logout(&state.api).await;
    Redirect::to("/login")
}

pub async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let Some(user) = state.session.user().await else {
        return Redirect::to("/login").into_response();
    };

    let certificados = user_certificates(&state, &user).await;

    let mut ctx = Context::new();
    ctx.insert("user", &user);
    ctx.insert("is_admin", &user.is_admin());
    ctx.insert("certificados", &certificados);
    render_template("dashboard.html", ctx).into_response()
}

/// The signed-in user's certificates: backend by recipient email when
/// possible, demo data when the backend cannot answer. Mirrors the
/// fallback the portal has always shipped with.
pub(crate) async fn user_certificates(state: &AppState, user: &User) -> Vec<Certificate> {
    if let Some(email) = &user.email {
        let token = state.session.token();
        match state
            .api
            .certificates_by_recipient(email, token.as_deref())
            .await
        {
            Ok(certificados) => return certificados,
            Err(err) => {
                warn!(%err, "certificate list unavailable, serving demo data");
            }
        }
    }
    certificates::demo_certificates_for(&user.cedula)
}

async fn admin_user(state: &AppState) -> Option<User> {
    state.session.user().await.filter(User::is_admin)
}

pub async fn admin_certificados(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }

    let token = state.session.token();
    let mut ctx = Context::new();
    match state
        .api
        .all_certificates(token.as_deref(), None, None, None)
        .await
    {
        Ok((certificados, total)) => {
            ctx.insert("certificados", &certificados);
            ctx.insert("total", &total);
        }
        Err(err) => {
            warn!(%err, "admin certificate list unavailable");
            ctx.insert("certificados", &Vec::<Certificate>::new());
            ctx.insert("total", &0);
            ctx.insert("error", &err.to_string());
        }
    }
    render_template("admin_certificados.html", ctx).into_response()
}

#[derive(Deserialize)]
pub struct CreateCertificadoForm {
    course_name: String,
    #[serde(default)]
    institucion: String,
    destinatario_id: String,
    #[serde(default)]
    course_description: String,
    #[serde(default)]
    expiration_date: String,
}

pub async fn crear_certificado_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }
    render_template("crear_certificado.html", users_context(&state).await).into_response()
}

pub async fn crear_certificado_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CreateCertificadoForm>,
) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }

    let request = CreateCertificateRequest {
        course_name: form.course_name.trim().to_string(),
        institucion: default_institucion(&form.institucion),
        destinatario_id: form.destinatario_id.trim().to_string(),
        course_description: form.course_description.trim().to_string(),
        expiration_date: non_empty(&form.expiration_date),
    };

    let token = state.session.token();
    let mut ctx = users_context(&state).await;
    match state.api.create_certificate(&request, token.as_deref()).await {
        Ok(_) => ctx.insert("mensaje", "Certificado creado correctamente"),
        Err(err) => {
            warn!(%err, "create certificate failed");
            ctx.insert("error", &err.to_string());
        }
    }
    render_template("crear_certificado.html", ctx).into_response()
}

#[derive(Deserialize)]
pub struct QuickCreateForm {
    course_name: String,
    #[serde(default)]
    institucion: String,
    #[serde(default)]
    destinatario_id: String,
    #[serde(default)]
    user_ids: String,
    #[serde(default)]
    course_description: String,
    #[serde(default)]
    expiration_date: String,
}

pub async fn crear_rapido_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }
    render_template("crear_certificado_rapido.html", users_context(&state).await).into_response()
}

pub async fn crear_rapido_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<QuickCreateForm>,
) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }

    let request = QuickCreateRequest {
        course_name: form.course_name.trim().to_string(),
        institucion: default_institucion(&form.institucion),
        destinatario_id: non_empty(&form.destinatario_id),
        user_ids: parse_id_list(&form.user_ids),
        course_description: non_empty(&form.course_description),
        expiration_date: non_empty(&form.expiration_date),
    };

    let token = state.session.token();
    let mut ctx = users_context(&state).await;
    if request.destinatario_id.is_none() && request.user_ids.is_empty() {
        ctx.insert("error", "Selecciona al menos un destinatario");
    } else {
        match state
            .api
            .quick_create_certificate(&request, token.as_deref())
            .await
        {
            Ok(_) => ctx.insert("mensaje", "Certificado creado correctamente"),
            Err(err) => {
                warn!(%err, "quick create failed");
                ctx.insert("error", &err.to_string());
            }
        }
    }
    render_template("crear_certificado_rapido.html", ctx).into_response()
}

#[derive(Deserialize)]
pub struct CreateUserForm {
    cedula: String,
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    role: String,
}

pub async fn crear_usuario_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }
    render_template("crear_usuario.html", Context::new()).into_response()
}

pub async fn crear_usuario_submit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<CreateUserForm>,
) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }

    let mut ctx = Context::new();
    let cedula = crate::session::clean_cedula(&form.cedula);
    if !crate::session::is_valid_cedula(&cedula) {
        ctx.insert(
            "error",
            "La cédula debe contener solo números (6-12 dígitos)",
        );
        return render_template("crear_usuario.html", ctx).into_response();
    }

    let request = CreateUserRequest {
        cedula,
        name: form.name.trim().to_string(),
        email: non_empty(&form.email),
        role: non_empty(&form.role),
    };

    let token = state.session.token();
    match state.api.create_user(&request, token.as_deref()).await {
        Ok(_) => ctx.insert("mensaje", "Usuario creado correctamente"),
        Err(err) => {
            warn!(%err, "create user failed");
            ctx.insert("error", &err.to_string());
        }
    }
    render_template("crear_usuario.html", ctx).into_response()
}

#[derive(Deserialize)]
pub struct AssignForm {
    #[serde(default)]
    user_ids: String,
}

pub async fn asignar_page(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }

    let token = state.session.token();
    let mut ctx = users_context(&state).await;
    ctx.insert("certificado_id", &id);
    match state.api.assigned_users(&id, token.as_deref()).await {
        Ok(asignados) => ctx.insert("asignados", &asignados),
        Err(err) => {
            warn!(%err, certificado = %id, "assigned user list unavailable");
            ctx.insert("asignados", &Vec::<crate::api::Recipient>::new());
        }
    }
    render_template("asignar_certificado.html", ctx).into_response()
}

pub async fn asignar_certificado(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<AssignForm>,
) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }

    let token = state.session.token();
    let user_ids = parse_id_list(&form.user_ids);
    if let Err(err) = state
        .api
        .assign_recipients(&id, &user_ids, token.as_deref())
        .await
    {
        warn!(%err, certificado = %id, "assignment failed");
    }
    Redirect::to("/admin/certificados").into_response()
}

#[derive(Deserialize)]
pub struct UpdateForm {
    #[serde(default)]
    course_name: String,
    #[serde(default)]
    institucion: String,
    #[serde(default)]
    destinatario_id: String,
    #[serde(default)]
    expiration_date: String,
    #[serde(default)]
    status: String,
}

pub async fn actualizar_certificado(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Form(form): Form<UpdateForm>,
) -> impl IntoResponse {
    if admin_user(&state).await.is_none() {
        return Redirect::to("/dashboard").into_response();
    }

    let request = crate::api::UpdateCertificateRequest {
        destinatario_id: non_empty(&form.destinatario_id),
        course_name: non_empty(&form.course_name),
        institucion: non_empty(&form.institucion),
        expiration_date: non_empty(&form.expiration_date),
        status: non_empty(&form.status),
    };

    let token = state.session.token();
    if let Err(err) = state
        .api
        .update_certificate(&id, &request, token.as_deref())
        .await
    {
        warn!(%err, certificado = %id, "update failed");
    }
    Redirect::to("/admin/certificados").into_response()
}

/// Context carrying the user list for the recipient selectors.
async fn users_context(state: &AppState) -> Context {
    let token = state.session.token();
    let mut ctx = Context::new();
    match state.api.list_users(token.as_deref()).await {
        Ok(users) => ctx.insert("usuarios", &users),
        Err(err) => {
            warn!(%err, "user list unavailable");
            ctx.insert("usuarios", &Vec::<crate::api::Recipient>::new());
        }
    }
    ctx
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn default_institucion(raw: &str) -> String {
    non_empty(raw).unwrap_or_else(|| "Movilis".to_string())
}

/// Recipient ids from a free-form field; commas, semicolons and whitespace
/// all separate.
fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn render_template(name: &str, ctx: Context) -> Html<String> {
    let tera = crate::templates::get_tera();
    let rendered = tera
        .render(name, &ctx)
        .unwrap_or_else(|_| format!("Template error: {}", name));
    Html(rendered)
}
