//! Account registration and role flags.

use super::Book;
use crate::error::{AppError, AppResult};
use crate::models::{Club, User};
use uuid::Uuid;

/// Create a user with an empty balance. Referrer and club must already be
/// loaded in the book.
pub fn register_user(
    book: &mut Book,
    username: &str,
    referrer_id: Option<Uuid>,
    club_id: Option<Uuid>,
) -> AppResult<User> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AppError::Validation("username is required".to_string()));
    }
    if let Some(referrer_id) = referrer_id {
        book.user(referrer_id)?;
    }
    if let Some(club_id) = club_id {
        book.club(club_id)?;
    }

    let user = User::new(username, referrer_id, club_id);
    book.insert_user(user.clone());
    Ok(user)
}

pub fn create_club(book: &mut Book, name: &str, owner_id: Option<Uuid>) -> AppResult<Club> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("club name is required".to_string()));
    }
    if let Some(owner_id) = owner_id {
        book.user(owner_id)?;
    }

    let club = Club::new(name, owner_id);
    book.insert_club(club.clone());
    Ok(club)
}

pub fn set_game_editor(book: &mut Book, user_id: Uuid, enabled: bool) -> AppResult<User> {
    let user = book.user_mut(user_id)?;
    user.is_game_editor = enabled;
    Ok(user.clone())
}

/// Grant admin rights; used when bootstrapping the first operator
pub fn grant_admin(book: &mut Book, user_id: Uuid) -> AppResult<User> {
    let user = book.user_mut(user_id)?;
    user.is_admin = true;
    Ok(user.clone())
}
