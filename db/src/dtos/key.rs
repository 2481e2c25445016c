use uuid::Uuid;

pub struct KeyCreateRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key_hashed: String,
    pub name: String,
}
