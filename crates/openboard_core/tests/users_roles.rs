use openboard_core::db::open_db_in_memory;
use openboard_core::{
    AddRoleRequest, AddUserRequest, FindUsersQuery, IdentityProvider, PageLimits, RepoError,
    Role, RoleRepository, SqliteRoleRepository, SqliteUserRepository, UserRepository,
    UserService,
};
use rusqlite::Connection;
use uuid::Uuid;

fn seed_roles(conn: &Connection, names: &[&str]) -> Vec<Role> {
    let repo = SqliteRoleRepository::try_new(conn).unwrap();
    names
        .iter()
        .map(|name| {
            repo.upsert_role(
                "",
                &AddRoleRequest {
                    name: name.to_string(),
                },
            )
            .unwrap()
        })
        .collect()
}

fn user_request(username: &str, email: &str, roles: &[&Role]) -> AddUserRequest {
    AddUserRequest {
        username: username.to_string(),
        email: email.to_string(),
        full_name: format!("{username} example"),
        password: "opaque-hash".to_string(),
        role_ids: roles.iter().map(|role| role.id.to_string()).collect(),
        ..AddUserRequest::default()
    }
}

fn by_email(email: &str) -> FindUsersQuery {
    FindUsersQuery {
        email: Some(email.to_string()),
        ..FindUsersQuery::default()
    }
}

fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn upsert_user_generates_id_and_returns_roles_in_request_order() {
    let mut conn = open_db_in_memory().unwrap();
    let roles = seed_roles(&conn, &["zeta", "alpha"]);
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();

    let user = repo
        .upsert_user("", &user_request("alice", "alice@example.com", &[&roles[0], &roles[1]]))
        .unwrap();

    assert!(IdentityProvider::new().parse(&user.id.to_string()).is_ok());
    assert_eq!(user.roles, vec![roles[0].clone(), roles[1].clone()]);
    assert!(user.created_at.is_some());
    assert!(user.deleted_at.is_none());

    let page = repo.find_users(&by_email("alice@example.com")).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, user.id);
    assert_eq!(page.items[0].role_ids(), vec![roles[0].id, roles[1].id]);
}

#[test]
fn upsert_existing_user_updates_fields_and_replaces_roles() {
    let mut conn = open_db_in_memory().unwrap();
    let roles = seed_roles(&conn, &["admin", "editor", "viewer"]);
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();

    let created = repo
        .upsert_user("", &user_request("bob", "bob@example.com", &[&roles[0], &roles[1]]))
        .unwrap();

    let mut update = user_request("bobby", "bob@example.com", &[&roles[2], &roles[0]]);
    update.email_hold = true;
    let updated = repo
        .upsert_user(&created.id.to_string(), &update)
        .unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.username, "bobby");
    assert!(updated.email_hold);
    assert!(updated.updated_at.is_some());
    assert_eq!(updated.role_ids(), vec![roles[2].id, roles[0].id]);

    let page = repo.find_users(&FindUsersQuery::default()).unwrap();
    assert_eq!(page.total, 1);
}

#[test]
fn upsert_user_without_roles_yields_empty_role_list() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();

    let user = repo
        .upsert_user("", &user_request("carol", "carol@example.com", &[]))
        .unwrap();
    assert!(user.roles.is_empty());
}

#[test]
fn duplicate_role_ids_are_collapsed() {
    let mut conn = open_db_in_memory().unwrap();
    let roles = seed_roles(&conn, &["one", "two"]);
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();

    let user = repo
        .upsert_user(
            "",
            &user_request(
                "dave",
                "dave@example.com",
                &[&roles[1], &roles[0], &roles[1]],
            ),
        )
        .unwrap();
    assert_eq!(user.role_ids(), vec![roles[1].id, roles[0].id]);
}

#[test]
fn membership_failure_rolls_back_user_row() {
    let mut conn = open_db_in_memory().unwrap();
    let roles = seed_roles(&conn, &["known"]);
    let missing_role = Role::new(Uuid::new_v4(), "missing");

    {
        let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();
        let err = repo
            .upsert_user(
                "",
                &user_request("erin", "erin@example.com", &[&roles[0], &missing_role]),
            )
            .unwrap_err();
        assert!(matches!(err, RepoError::Db(_)));
        assert!(!err.is_client_error());

        let page = repo
            .find_users(&FindUsersQuery {
                include_deleted: true,
                ..by_email("erin@example.com")
            })
            .unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }

    assert_eq!(count_rows(&conn, "users"), 0);
    assert_eq!(count_rows(&conn, "user_roles"), 0);
}

#[test]
fn email_conflict_with_other_user_rolls_back() {
    let mut conn = open_db_in_memory().unwrap();
    let roles = seed_roles(&conn, &["member"]);
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();

    let first = repo
        .upsert_user("", &user_request("frank", "shared@example.com", &[&roles[0]]))
        .unwrap();
    let err = repo
        .upsert_user("", &user_request("grace", "shared@example.com", &[]))
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));

    let page = repo.find_users(&by_email("shared@example.com")).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].id, first.id);
    assert_eq!(page.items[0].role_ids(), vec![roles[0].id]);
}

#[test]
fn malformed_identifiers_fail_before_any_write() {
    let mut conn = open_db_in_memory().unwrap();
    {
        let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();

        let err = repo
            .upsert_user("not-a-uuid", &user_request("hank", "hank@example.com", &[]))
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidIdentifier(_)));
        assert!(err.is_client_error());

        let mut bad_roles = user_request("hank", "hank@example.com", &[]);
        bad_roles.role_ids = vec!["role-without-uuid".to_string()];
        let err = repo.upsert_user("", &bad_roles).unwrap_err();
        assert!(matches!(err, RepoError::InvalidIdentifier(_)));

        let err = repo
            .upsert_user("", &user_request("hank", "   ", &[]))
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidArgument(_)));
    }
    assert_eq!(count_rows(&conn, "users"), 0);
}

#[test]
fn find_counts_all_matches_while_paging_base_users() {
    let mut conn = open_db_in_memory().unwrap();
    let roles = seed_roles(&conn, &["a", "b", "c"]);
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();

    for idx in 0..5 {
        repo.upsert_user(
            "",
            &user_request(
                &format!("user{idx}"),
                &format!("user{idx}@example.com"),
                &[&roles[0], &roles[1], &roles[2]],
            ),
        )
        .unwrap();
    }

    let first = repo
        .find_users(&FindUsersQuery {
            limit: Some(1),
            lapse: 0,
            ..FindUsersQuery::default()
        })
        .unwrap();
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.total, 5);
    assert_eq!(first.items[0].roles.len(), 3);

    let mut seen = Vec::new();
    for lapse in [0, 2, 4] {
        let page = repo
            .find_users(&FindUsersQuery {
                limit: Some(2),
                lapse,
                ..FindUsersQuery::default()
            })
            .unwrap();
        assert_eq!(page.total, 5);
        for user in page.items {
            assert_eq!(user.roles.len(), 3);
            assert!(!seen.contains(&user.id));
            seen.push(user.id);
        }
    }
    assert_eq!(seen.len(), 5);
}

#[test]
fn find_limit_is_clamped_by_page_limits() {
    let mut conn = open_db_in_memory().unwrap();
    let limits = PageLimits {
        default_limit: 2,
        max_limit: 3,
    };
    let mut repo = SqliteUserRepository::try_new(&mut conn)
        .unwrap()
        .with_page_limits(limits);

    for idx in 0..4 {
        repo.upsert_user(
            "",
            &user_request(&format!("u{idx}"), &format!("u{idx}@example.com"), &[]),
        )
        .unwrap();
    }

    let defaulted = repo.find_users(&FindUsersQuery::default()).unwrap();
    assert_eq!(defaulted.applied_limit, 2);
    assert_eq!(defaulted.items.len(), 2);

    let clamped = repo
        .find_users(&FindUsersQuery {
            limit: Some(100),
            ..FindUsersQuery::default()
        })
        .unwrap();
    assert_eq!(clamped.applied_limit, 3);
    assert_eq!(clamped.items.len(), 3);
    assert_eq!(clamped.total, 4);
}

#[test]
fn find_filters_by_role_and_hold_flags() {
    let mut conn = open_db_in_memory().unwrap();
    let roles = seed_roles(&conn, &["mod", "guest"]);
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();

    let moderator = repo
        .upsert_user("", &user_request("ivy", "ivy@example.com", &[&roles[0], &roles[1]]))
        .unwrap();
    let mut held = user_request("jack", "jack@example.com", &[&roles[1]]);
    held.email_hold = true;
    let guest = repo.upsert_user("", &held).unwrap();

    let mods = repo
        .find_users(&FindUsersQuery {
            role_ids: vec![roles[0].id.to_string()],
            ..FindUsersQuery::default()
        })
        .unwrap();
    assert_eq!(mods.total, 1);
    assert_eq!(mods.items[0].id, moderator.id);
    assert_eq!(mods.items[0].roles.len(), 2);

    let holding = repo
        .find_users(&FindUsersQuery {
            email_hold: Some(true),
            ..FindUsersQuery::default()
        })
        .unwrap();
    assert_eq!(holding.total, 1);
    assert_eq!(holding.items[0].id, guest.id);

    let everyone = repo.find_users(&FindUsersQuery::default()).unwrap();
    assert_eq!(everyone.total, 2);
}

#[test]
fn delete_user_is_soft_and_idempotent() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();
    let user = repo
        .upsert_user("", &user_request("kim", "kim@example.com", &[]))
        .unwrap();

    repo.delete_user(&user.id.to_string()).unwrap();
    repo.delete_user(&user.id.to_string()).unwrap();

    let visible = repo.find_users(&by_email("kim@example.com")).unwrap();
    assert_eq!(visible.total, 0);

    let all = repo
        .find_users(&FindUsersQuery {
            include_deleted: true,
            ..by_email("kim@example.com")
        })
        .unwrap();
    assert_eq!(all.total, 1);
    assert!(all.items[0].deleted_at.is_some());
    assert!(!all.items[0].is_active());

    let missing = Uuid::new_v4();
    let err = repo.delete_user(&missing.to_string()).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == missing));
}

#[test]
fn service_trims_input_and_finds_by_email() {
    let mut conn = open_db_in_memory().unwrap();
    let roles = seed_roles(&conn, &["staff"]);
    let repo = SqliteUserRepository::try_new(&mut conn).unwrap();
    let mut service = UserService::new(repo);

    let request = AddUserRequest {
        username: "  lee  ".to_string(),
        email: " lee@example.com ".to_string(),
        role_ids: vec![format!(" {} ", roles[0].id)],
        ..AddUserRequest::default()
    };
    let user = service.add_user("", request).unwrap();
    assert_eq!(user.username, "lee");
    assert_eq!(user.email, "lee@example.com");

    let found = service.find_user_by_email("lee@example.com").unwrap().unwrap();
    assert_eq!(found, user);
    assert!(service.find_user_by_email("nobody@example.com").unwrap().is_none());
}

#[test]
fn users_serialize_without_password() {
    let mut conn = open_db_in_memory().unwrap();
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();
    let user = repo
        .upsert_user("", &user_request("max", "max@example.com", &[]))
        .unwrap();

    let json = serde_json::to_value(&user).unwrap();
    assert_eq!(json["email"], "max@example.com");
    assert!(json.get("password").is_none());
}

#[test]
fn upsert_user_reports_consistency_error_when_reread_misses() {
    let mut conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER users_rewrite_email AFTER INSERT ON users
         BEGIN
             UPDATE users SET email = email || '.moved' WHERE user_id = NEW.user_id;
         END;",
    )
    .unwrap();
    let mut repo = SqliteUserRepository::try_new(&mut conn).unwrap();

    let err = repo
        .upsert_user("", &user_request("hana", "hana@example.com", &[]))
        .unwrap_err();
    assert!(matches!(err, RepoError::Consistency(_)));
    assert!(!err.is_client_error());
    drop(repo);

    assert_eq!(count_rows(&conn, "users"), 1);
}
