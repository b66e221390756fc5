//! Menu text shown by the session

pub const GREETING: &str = "\n\n*******************************************************\n              User Interface\n*******************************************************\n";

pub const CHOICE_PROMPT: &str = "Please make your choice: ";
pub const INVALID_INPUT: &str = "Your input is invalid!";
pub const UNRECOGNIZED_CHOICE: &str = "Unrecognized choice!";

#[must_use]
pub fn main_menu() -> String {
    ["MAIN MENU", "---------", "1. Create user", "2. Log in", "9. < EXIT"].join("\n")
}

#[must_use]
pub fn user_menu() -> String {
    [
        "MAIN MENU",
        "---------",
        "1. Goto Menu",
        "2. Update Profile",
        "3. Place an Order",
        "4. Update an Order",
        "5. View Order History",
        ".........................",
        "9. Log out",
    ]
    .join("\n")
}

/// Menu browsing screen; management entries only for Managers
#[must_use]
pub fn cafe_menu(show_management: bool) -> String {
    let mut lines = vec![
        "CAFE MENU",
        "---------",
        "1. List all items",
        "2. Search items by name",
        "3. Search items by type",
    ];
    if show_management {
        lines.extend(["4. Add an item", "5. Update an item", "6. Delete an item"]);
    }
    lines.extend([".........................", "9. Return to the main menu"]);
    lines.join("\n")
}

#[must_use]
pub fn item_fields() -> String {
    [
        "Which attribute should change?",
        "1. Name",
        "2. Description",
        "3. Price",
        "4. Type",
        "5. Image URL",
    ]
    .join("\n")
}

#[must_use]
pub fn payment_menu() -> String {
    ["How would you like to pay?", "1. Pay now", "2. Pay later"].join("\n")
}

#[must_use]
pub fn profile_menu() -> String {
    [
        "UPDATE PROFILE",
        "--------------",
        "1. Update your login.",
        "2. Update your phone number.",
        "3. Update your password.",
        "4. Update your favorite items.",
        "5. For managers, update user type.",
        "..................................",
        "9. Return to the main menu.",
    ]
    .join("\n")
}

#[must_use]
pub fn role_menu() -> String {
    ["Choose the user type to update to.", "1. Manager", "2. Employee", "3. Customer"].join("\n")
}
