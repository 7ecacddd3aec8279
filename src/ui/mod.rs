pub mod client_wizard;
pub mod clients;
pub mod components;
pub mod email_wizard;
pub mod invoice_wizard;
pub mod invoices;
pub mod login;
pub mod marketing_wizard;
pub mod repeat_rules;

/// Move a list selection one step, wrapping at either end.
pub(crate) fn step_selection(selected: Option<usize>, len: usize, forward: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    let i = match selected {
        Some(i) if forward => {
            if i >= len - 1 {
                0
            } else {
                i + 1
            }
        }
        Some(i) => {
            if i == 0 {
                len - 1
            } else {
                i - 1
            }
        }
        None => 0,
    };
    Some(i)
}

#[cfg(test)]
mod tests {
    use super::step_selection;

    #[test]
    fn selection_wraps_both_ways() {
        assert_eq!(step_selection(Some(2), 3, true), Some(0));
        assert_eq!(step_selection(Some(0), 3, false), Some(2));
        assert_eq!(step_selection(None, 3, false), Some(0));
        assert_eq!(step_selection(Some(1), 0, true), None);
    }
}
