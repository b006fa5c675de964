//! Property-based checks for cart pricing.

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use bookstore_api::{
    entities::book,
    services::catalog::{resolve_lines, CartItem},
};

fn book(id: String, cents: i64) -> book::Model {
    let now = Utc::now();
    book::Model {
        id,
        title: "Untitled".into(),
        description: None,
        category: None,
        cover_image: None,
        trending: false,
        old_price: None,
        new_price: Decimal::new(cents, 2),
        created_at: now,
        updated_at: now,
    }
}

fn cart_strategy() -> impl Strategy<Value = Vec<(i64, Option<i64>)>> {
    prop::collection::vec((0i64..1_000_000, prop::option::of(0i64..500)), 1..20)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn total_is_sum_of_catalog_price_times_quantity(lines in cart_strategy()) {
        let mut books = HashMap::new();
        let mut items = Vec::new();
        let mut expected = Decimal::ZERO;

        for (idx, (cents, quantity)) in lines.iter().enumerate() {
            let id = format!("b{idx}");
            books.insert(id.clone(), book(id.clone(), *cents));
            items.push(CartItem { book_id: id, quantity: *quantity, title: None });

            let effective = match quantity {
                None | Some(0) => 1,
                Some(q) => *q,
            };
            expected += Decimal::new(*cents, 2) * Decimal::from(effective);
        }

        let priced = resolve_lines(&items, &books).unwrap();
        prop_assert_eq!(priced.total_price, expected);
        prop_assert_eq!(priced.lines.len(), items.len());
        prop_assert!(priced.lines.iter().all(|l| l.quantity >= 1));
    }

    #[test]
    fn negative_quantity_never_prices(q in i64::MIN..0) {
        let mut books = HashMap::new();
        books.insert("b1".to_string(), book("b1".into(), 1000));
        let items = vec![CartItem { book_id: "b1".into(), quantity: Some(q), title: None }];
        prop_assert!(resolve_lines(&items, &books).is_err());
    }
}
