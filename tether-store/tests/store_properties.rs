//! Property-based tests for store inverse actions.
//!
//! These tests verify the contract that makes optimistic mutation safe:
//! - Every write returns an inverse that restores the exact prior contents.
//! - Unwinding a stack of inverses in LIFO order restores the state from
//!   before the first write, regardless of how the writes interleave.
//! - Bulk writes collapse duplicate keys so the last value wins.

use proptest::prelude::*;
use tether_store::{Rollback, RollbackStack, Store};
use tether_types::Keyed;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct Item {
    key: u8,
    value: u8,
}

impl Keyed for Item {
    type Key = u8;

    fn key(&self) -> u8 {
        self.key
    }
}

#[derive(Debug, Clone)]
enum Op {
    Set(Item),
    SetMany(Vec<Item>),
    Delete(u8),
    DeleteMany(Vec<u8>),
}

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn item_strategy() -> impl Strategy<Value = Item> {
    (0u8..16, any::<u8>()).prop_map(|(key, value)| Item { key, value })
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        item_strategy().prop_map(Op::Set),
        prop::collection::vec(item_strategy(), 0..4).prop_map(Op::SetMany),
        (0u8..16).prop_map(Op::Delete),
        prop::collection::vec(0u8..16, 0..4).prop_map(Op::DeleteMany),
    ]
}

fn seed_strategy() -> impl Strategy<Value = Vec<Item>> {
    prop::collection::vec(item_strategy(), 0..8)
}

fn snapshot(store: &Store<Item>) -> Vec<Item> {
    let mut items = store.list();
    items.sort();
    items
}

fn apply(store: &Store<Item>, op: Op) -> Rollback {
    match op {
        Op::Set(item) => store.set(item),
        Op::SetMany(items) => store.set_many(items),
        Op::Delete(key) => store.delete(&key),
        Op::DeleteMany(keys) => store.delete_many(&keys),
    }
}

// =============================================================================
// INVERSE ACTION PROPERTY TESTS
// =============================================================================

mod inverse_properties {
    use super::*;

    proptest! {
        /// A single write's inverse restores the exact prior contents.
        #[test]
        fn single_inverse_restores_prior_contents(
            seed in seed_strategy(),
            op in op_strategy(),
        ) {
            let store: Store<Item> = Store::new();
            let _ = store.set_many(seed);
            let before = snapshot(&store);

            let undo = apply(&store, op);
            undo.run().unwrap();

            prop_assert_eq!(snapshot(&store), before);
        }

        /// Unwinding every inverse in LIFO order restores the seed state,
        /// no matter how many writes happened in between.
        #[test]
        fn unwinding_a_stack_restores_seed_state(
            seed in seed_strategy(),
            ops in prop::collection::vec(op_strategy(), 0..12),
        ) {
            let store: Store<Item> = Store::new();
            let _ = store.set_many(seed);
            let before = snapshot(&store);

            let stack = RollbackStack::new();
            for op in ops {
                stack.push(apply(&store, op));
            }
            stack.unwind();

            prop_assert_eq!(snapshot(&store), before);
        }

        /// After unwinding, the stack is empty and a second unwind is inert.
        #[test]
        fn unwind_is_single_shot(
            ops in prop::collection::vec(op_strategy(), 1..8),
        ) {
            let store: Store<Item> = Store::new();
            let stack = RollbackStack::new();
            for op in ops {
                stack.push(apply(&store, op));
            }

            stack.unwind();
            let contents_after_first = snapshot(&store);

            prop_assert_eq!(stack.unwind(), 0);
            prop_assert_eq!(snapshot(&store), contents_after_first);
        }
    }
}

// =============================================================================
// BULK WRITE PROPERTY TESTS
// =============================================================================

mod bulk_write_properties {
    use super::*;

    proptest! {
        /// set_many with duplicate keys stores the last value for each key.
        #[test]
        fn set_many_last_value_wins(items in prop::collection::vec(item_strategy(), 0..12)) {
            let store: Store<Item> = Store::new();
            let _ = store.set_many(items.clone());

            let mut expected: std::collections::HashMap<u8, Item> = Default::default();
            for item in items {
                expected.insert(item.key, item);
            }
            let mut expected: Vec<Item> = expected.into_values().collect();
            expected.sort();

            prop_assert_eq!(snapshot(&store), expected);
        }
    }
}
