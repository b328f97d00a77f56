pub mod bookmark;
pub mod session;

pub use bookmark::{Bookmark, BookmarkForm, NewBookmark};
pub use session::{Session, User};
