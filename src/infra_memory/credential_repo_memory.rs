use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Default)]
pub struct MemoryCredentialRepo {
    by_id: DashMap<UserId, CredentialRecord>,
    by_email: DashMap<String, UserId>,
}

impl MemoryCredentialRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Change a subject's email in place, as an external identity admin would.
    pub fn set_email(&self, user_id: UserId, email: &str) {
        if let Some(mut rec) = self.by_id.get_mut(&user_id) {
            self.by_email.remove(&rec.email);
            rec.email = email.to_string();
            self.by_email.insert(email.to_string(), user_id);
        }
    }

    pub fn set_role(&self, user_id: UserId, role: Role) {
        if let Some(mut rec) = self.by_id.get_mut(&user_id) {
            rec.role = role;
        }
    }

    pub fn remove(&self, user_id: UserId) {
        if let Some((_, rec)) = self.by_id.remove(&user_id) {
            self.by_email.remove(&rec.email);
        }
    }
}

#[async_trait::async_trait]
impl CredentialRepo for MemoryCredentialRepo {
    async fn create(&self, credential: NewCredential) -> Result<UserId, StoreError> {
        match self.by_email.entry(credential.email.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate),
            Entry::Vacant(slot) => {
                let user_id = UserId::new_v4();
                self.by_id.insert(
                    user_id,
                    CredentialRecord {
                        user_id,
                        name: credential.name,
                        email: credential.email,
                        password_hash: credential.password_hash,
                        role: credential.role,
                        created_at: Utc::now(),
                    },
                );
                slot.insert(user_id);
                Ok(user_id)
            }
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRecord>, StoreError> {
        let Some(user_id) = self.by_email.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.by_id.get(&user_id).map(|rec| rec.clone()))
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<CredentialRecord>, StoreError> {
        Ok(self.by_id.get(&user_id).map(|rec| rec.clone()))
    }
}
