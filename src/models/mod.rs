pub mod book;
pub mod book_category;
pub mod book_category_links;
pub mod book_transaction;
pub mod user;
pub mod user_transactions;
