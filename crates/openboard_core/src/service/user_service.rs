//! User use-case service.
//!
//! # Responsibility
//! - Trim user request fields before the upsert coordinator sees them.
//! - Delegate persistence to a `UserRepository`.
//!
//! # Invariants
//! - The password credential is passed through untouched.

use crate::model::page::Page;
use crate::model::user::User;
use crate::repo::user_repo::{AddUserRequest, FindUsersQuery, UserRepository};
use crate::repo::RepoResult;

/// User service facade over repository implementations.
pub struct UserService<R: UserRepository> {
    repo: R,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates or updates a user. Empty `supplied_id` creates a new one.
    pub fn add_user(&mut self, supplied_id: &str, request: AddUserRequest) -> RepoResult<User> {
        let request = normalize_add_user(request);
        self.repo.upsert_user(supplied_id.trim(), &request)
    }

    pub fn find_users(&self, query: &FindUsersQuery) -> RepoResult<Page<User>> {
        self.repo.find_users(query)
    }

    /// Finds the user registered under `email`, deleted users included.
    pub fn find_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let query = FindUsersQuery {
            email: Some(email.trim().to_string()),
            include_deleted: true,
            limit: Some(1),
            ..FindUsersQuery::default()
        };
        Ok(self.repo.find_users(&query)?.items.into_iter().next())
    }

    pub fn delete_user(&self, user_id: &str) -> RepoResult<()> {
        self.repo.delete_user(user_id.trim())
    }
}

fn normalize_add_user(request: AddUserRequest) -> AddUserRequest {
    AddUserRequest {
        username: request.username.trim().to_string(),
        email: request.email.trim().to_string(),
        altmail: request.altmail.trim().to_string(),
        full_name: request.full_name.trim().to_string(),
        avatar: request.avatar.trim().to_string(),
        role_ids: request
            .role_ids
            .iter()
            .map(|id| id.trim().to_string())
            .collect(),
        ..request
    }
}

#[cfg(test)]
mod tests {
    use super::normalize_add_user;
    use crate::repo::user_repo::AddUserRequest;

    #[test]
    fn normalize_trims_text_fields_but_not_password() {
        let normalized = normalize_add_user(AddUserRequest {
            username: "  alice ".to_string(),
            email: " alice@example.com\n".to_string(),
            password: " secret ".to_string(),
            role_ids: vec![" 6f9619ff-8b86-d011-b42d-00cf4fc964ff ".to_string()],
            ..AddUserRequest::default()
        });
        assert_eq!(normalized.username, "alice");
        assert_eq!(normalized.email, "alice@example.com");
        assert_eq!(normalized.password, " secret ");
        assert_eq!(
            normalized.role_ids,
            vec!["6f9619ff-8b86-d011-b42d-00cf4fc964ff".to_string()]
        );
    }
}
