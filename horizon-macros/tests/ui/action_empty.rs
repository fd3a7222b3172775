use horizon_domain::message::Action;
use horizon_macros::action;

#[action]
enum Nothing {}

fn main() {
    assert!(Nothing::TYPES.is_empty());
}
