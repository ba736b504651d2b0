#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
}
