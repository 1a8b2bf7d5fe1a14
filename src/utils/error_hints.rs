/// Best-effort human readable description of a backend error message.
///
/// Matching is substring based on the lowercased text; the first rule that
/// matches wins.
pub fn describe(message: &str) -> &'static str {
    let lower = message.to_lowercase();

    if lower.contains("doesn't exist") || lower.contains("does not exist") {
        return "A required table is missing. Run the database migrations and try again.";
    }
    if lower.contains("duplicate") || lower.contains("unique") {
        return "A record with the same value already exists.";
    }
    if lower.contains("foreign key") {
        return "A referenced record does not exist or is still in use.";
    }
    if lower.contains("insufficient") || lower.contains("shortage") {
        return "There is not enough stock for one or more inventory items.";
    }
    if lower.contains("connection") || lower.contains("timed out") || lower.contains("pool") {
        return "The database could not be reached. Please retry in a moment.";
    }
    if lower.contains("permission") || lower.contains("denied") {
        return "You do not have permission to perform this action.";
    }

    "Something went wrong. Please try again or contact an administrator."
}

#[cfg(test)]
mod tests {
    use super::describe;

    #[test]
    fn missing_table_suggests_migration() {
        let hint = describe("Table 'salon.service_products' doesn't exist");
        assert!(hint.contains("migrations"));
        assert!(describe("relation \"alerts\" does not exist").contains("migrations"));
    }

    #[test]
    fn duplicate_and_foreign_key() {
        assert!(describe("Duplicate entry 'x' for key 'email'").contains("already exists"));
        assert!(describe("Cannot add or update a child row: a foreign key constraint fails")
            .contains("referenced record"));
    }

    #[test]
    fn unknown_falls_back_to_generic() {
        assert!(describe("kaboom").starts_with("Something went wrong"));
    }
}
