//! Demo catalogue and accounts.
//!
//! Goes through the repositories' create operations only; no ledger or
//! transaction logic runs here. Safe to call on a database that was already
//! seeded: existing categories are reused, existing users and books are skipped.

use crate::domain::{
    BookRepository, CategoryRepository, DomainError, NewBook, NewUser, UserRepository, UserType,
};
use crate::infrastructure::auth::hash_password;

struct DemoBook {
    name: &'static str,
    alternate_title: Option<&'static str>,
    author: &'static str,
    language: &'static str,
    publisher: &'static str,
    copies: i32,
    categories: &'static [&'static str],
}

const CATEGORIES: [&str; 5] = ["Fiction", "Science Fiction", "History", "Philosophy", "Science"];

const BOOKS: [DemoBook; 5] = [
    DemoBook {
        name: "Dune",
        alternate_title: None,
        author: "Frank Herbert",
        language: "English",
        publisher: "Chilton Books",
        copies: 3,
        categories: &["Fiction", "Science Fiction"],
    },
    DemoBook {
        name: "The Name of the Rose",
        alternate_title: Some("Il nome della rosa"),
        author: "Umberto Eco",
        language: "English",
        publisher: "Harcourt",
        copies: 2,
        categories: &["Fiction", "History"],
    },
    DemoBook {
        name: "Meditations",
        alternate_title: Some("Ta eis heauton"),
        author: "Marcus Aurelius",
        language: "English",
        publisher: "Penguin Classics",
        copies: 1,
        categories: &["Philosophy", "History"],
    },
    DemoBook {
        name: "A Brief History of Time",
        alternate_title: None,
        author: "Stephen Hawking",
        language: "English",
        publisher: "Bantam Books",
        copies: 2,
        categories: &["Science"],
    },
    DemoBook {
        name: "Foundation",
        alternate_title: None,
        author: "Isaac Asimov",
        language: "English",
        publisher: "Gnome Press",
        copies: 1,
        categories: &["Fiction", "Science Fiction"],
    },
];

const USERS: [(UserType, &str, &str, &str); 3] = [
    (UserType::Admin, "Library Admin", "admin@library.test", "admin"),
    (UserType::Member, "Ada Lovelace", "ada@library.test", "member"),
    (UserType::Member, "Alan Turing", "alan@library.test", "member"),
];

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories: usize,
    pub books: usize,
    pub users: usize,
}

pub async fn seed_demo_data(
    categories: &dyn CategoryRepository,
    books: &dyn BookRepository,
    users: &dyn UserRepository,
) -> Result<SeedSummary, DomainError> {
    let mut summary = SeedSummary::default();

    // 1. Categories
    let mut category_ids = Vec::with_capacity(CATEGORIES.len());
    for name in CATEGORIES {
        let category = match categories.find_by_name(name).await? {
            Some(existing) => existing,
            None => {
                summary.categories += 1;
                categories.create(name.to_owned()).await?
            }
        };
        category_ids.push((name, category.id));
    }

    // 2. Books, skipped when a book of the same name is already catalogued
    let existing: Vec<String> = books.find_all().await?.into_iter().map(|b| b.name).collect();
    for demo in BOOKS.iter().filter(|b| !existing.iter().any(|n| n == b.name)) {
        let ids = category_ids
            .iter()
            .filter(|(name, _)| demo.categories.contains(name))
            .map(|(_, id)| *id)
            .collect();

        books
            .create(NewBook {
                name: demo.name.to_owned(),
                alternate_title: demo.alternate_title.map(str::to_owned),
                author: demo.author.to_owned(),
                language: Some(demo.language.to_owned()),
                publisher: Some(demo.publisher.to_owned()),
                total_copies: demo.copies,
                category_ids: ids,
            })
            .await?;
        summary.books += 1;
    }

    // 3. Users, skipped before hashing when the email is taken
    let registered: Vec<String> = users.find_all().await?.into_iter().map(|u| u.email).collect();
    for (user_type, full_name, email, password) in USERS {
        if registered.iter().any(|e| e == email) {
            tracing::debug!("Demo user '{}' already exists", full_name);
            continue;
        }

        let password_hash = hash_password(password).map_err(DomainError::InvalidInput)?;
        users
            .create(NewUser {
                user_type,
                full_name: full_name.to_owned(),
                email: email.to_owned(),
                phone: None,
                address: None,
                password_hash,
            })
            .await?;
        summary.users += 1;
    }

    Ok(summary)
}
