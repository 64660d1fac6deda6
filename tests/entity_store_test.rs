//! Entity Store Tests
//! Repository contracts: lookups, uniqueness, category links and seeding

use circulation::db;
use circulation::domain::{DomainError, NewBook, NewUser, UpdateBook, UpdateUser, UserType};
use circulation::infrastructure::AppState;
use circulation::seed;
use circulation::services::CirculationPolicy;

async fn setup_test_state() -> AppState {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    AppState::new(db, CirculationPolicy::default())
}

fn new_book(name: &str, copies: i32, category_ids: Vec<i32>) -> NewBook {
    NewBook {
        name: name.to_string(),
        alternate_title: None,
        author: "Test Author".to_string(),
        language: None,
        publisher: None,
        total_copies: copies,
        category_ids,
    }
}

fn new_member(full_name: &str, email: &str) -> NewUser {
    NewUser {
        user_type: UserType::Member,
        full_name: full_name.to_string(),
        email: email.to_string(),
        phone: Some("555-0100".to_string()),
        address: None,
        password_hash: "$argon2id$dummy_hash".to_string(),
    }
}

#[tokio::test]
async fn test_book_starts_fully_available() {
    let state = setup_test_state().await;

    let book = state
        .book_repo
        .create(new_book("Fresh Stock", 4, vec![]))
        .await
        .unwrap();

    assert_eq!(book.total_copies, 4);
    assert_eq!(book.available_copies, 4);
    assert_eq!(state.book_repo.get(book.id).await.unwrap(), book);
    assert!(state.book_repo.find_by_id(999).await.unwrap().is_none());
    assert!(matches!(
        state.book_repo.get(999).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_book_rejects_negative_copies() {
    let state = setup_test_state().await;
    let err = state
        .book_repo
        .create(new_book("Impossible", -1, vec![]))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidInput(_)));
}

#[tokio::test]
async fn test_book_with_unknown_category_is_not_created() {
    let state = setup_test_state().await;
    let fiction = state.category_repo.create("Fiction".to_string()).await.unwrap();

    let err = state
        .book_repo
        .create(new_book("Orphan", 1, vec![fiction.id, 42]))
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::NotFound(_)));

    // The insert was rolled back with the failed link
    assert!(state.book_repo.find_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_book_category_links_both_ways() {
    let state = setup_test_state().await;
    let fiction = state.category_repo.create("Fiction".to_string()).await.unwrap();
    let history = state.category_repo.create("History".to_string()).await.unwrap();

    let book = state
        .book_repo
        .create(new_book("The Name of the Rose", 2, vec![fiction.id, history.id]))
        .await
        .unwrap();

    let names: Vec<String> = state
        .book_repo
        .categories_of(book.id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, vec!["Fiction", "History"]);

    let in_history = state.category_repo.books_in(history.id).await.unwrap();
    assert_eq!(in_history.len(), 1);
    assert_eq!(in_history[0].id, book.id);

    // Replacing the set drops the old links
    let updated = state
        .book_repo
        .update(
            book.id,
            UpdateBook {
                alternate_title: Some(Some("Il nome della rosa".to_string())),
                category_ids: Some(vec![fiction.id]),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.alternate_title.as_deref(), Some("Il nome della rosa"));
    assert_eq!(updated.available_copies, 2);
    assert!(state.category_repo.books_in(history.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_category_names_are_unique() {
    let state = setup_test_state().await;
    let science = state.category_repo.create("Science".to_string()).await.unwrap();
    let art = state.category_repo.create("Art".to_string()).await.unwrap();

    assert!(matches!(
        state.category_repo.create("Science".to_string()).await,
        Err(DomainError::Conflict(_))
    ));
    assert!(matches!(
        state.category_repo.rename(art.id, "Science".to_string()).await,
        Err(DomainError::Conflict(_))
    ));
    assert!(matches!(
        state.category_repo.create("   ".to_string()).await,
        Err(DomainError::InvalidInput(_))
    ));

    // Renaming to its own name is not a conflict
    let same = state
        .category_repo
        .rename(science.id, "Science".to_string())
        .await
        .unwrap();
    assert_eq!(same, science);

    let found = state.category_repo.find_by_name("Art").await.unwrap();
    assert_eq!(found, Some(art));
}

#[tokio::test]
async fn test_user_name_and_email_are_unique() {
    let state = setup_test_state().await;
    let ada = state
        .user_repo
        .create(new_member("Ada Lovelace", "ada@example.org"))
        .await
        .unwrap();
    assert_eq!(ada.points, 0);
    assert!(!ada.is_admin);
    assert!(ada.active_transactions.is_empty());

    assert!(matches!(
        state
            .user_repo
            .create(new_member("Ada Lovelace", "other@example.org"))
            .await,
        Err(DomainError::Conflict(_))
    ));
    assert!(matches!(
        state
            .user_repo
            .create(new_member("Someone Else", "ADA@example.org"))
            .await,
        Err(DomainError::Conflict(_))
    ));

    let alan = state
        .user_repo
        .create(new_member("Alan Turing", "alan@example.org"))
        .await
        .unwrap();
    assert!(matches!(
        state
            .user_repo
            .update(
                alan.id,
                UpdateUser {
                    email: Some("ada@example.org".to_string()),
                    ..Default::default()
                }
            )
            .await,
        Err(DomainError::Conflict(_))
    ));

    let moved = state
        .user_repo
        .update(
            alan.id,
            UpdateUser {
                address: Some(Some("Bletchley Park".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.address.as_deref(), Some("Bletchley Park"));
    assert_eq!(moved.email, "alan@example.org");
}

#[tokio::test]
async fn test_admin_users_carry_the_flag() {
    let state = setup_test_state().await;
    let admin = state
        .user_repo
        .create(NewUser {
            user_type: UserType::Admin,
            ..new_member("Head Librarian", "head@example.org")
        })
        .await
        .unwrap();
    assert!(admin.is_admin);
    assert_eq!(admin.user_type, UserType::Admin);
}

#[tokio::test]
async fn test_seed_is_idempotent() {
    let state = setup_test_state().await;

    let first = seed::seed_demo_data(
        state.category_repo.as_ref(),
        state.book_repo.as_ref(),
        state.user_repo.as_ref(),
    )
    .await
    .expect("Seeding failed");
    assert_eq!(first.categories, 5);
    assert_eq!(first.books, 5);
    assert_eq!(first.users, 3);

    let second = seed::seed_demo_data(
        state.category_repo.as_ref(),
        state.book_repo.as_ref(),
        state.user_repo.as_ref(),
    )
    .await
    .expect("Re-seeding failed");
    assert_eq!(second, seed::SeedSummary::default());

    for book in state.book_repo.find_all().await.unwrap() {
        assert_eq!(book.available_copies, book.total_copies);
        assert!(!state.book_repo.categories_of(book.id).await.unwrap().is_empty());
    }
    let users = state.user_repo.find_all().await.unwrap();
    assert_eq!(users.iter().filter(|u| u.is_admin).count(), 1);
}
