use chrono::Utc;
use domain::{Delivery, Item, Order, Payment};
use rand::Rng;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Random ASCII-letter string of length `n`
pub fn random_letters<R: Rng + ?Sized>(rng: &mut R, n: usize) -> String {
    (0..n)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

/// Generate a random but well-formed order with a fresh 19-letter OrderUID
pub fn random_order() -> Order {
    let mut rng = rand::thread_rng();

    let order_uid = random_letters(&mut rng, 19);
    let track_number = random_letters(&mut rng, 14);
    let now = Utc::now();

    let delivery = Delivery {
        delivery_id: 0,
        name: random_letters(&mut rng, 11),
        phone: random_letters(&mut rng, 11),
        zip: "2639809".to_string(),
        city: "Kiryat Mozkin".to_string(),
        address: "Ploshad Mira 15".to_string(),
        region: "Kraiot".to_string(),
        email: "test@gmail.com".to_string(),
    };

    let payment = Payment {
        transaction: order_uid.clone(),
        request_id: String::new(),
        currency: "USD".to_string(),
        provider: "wbpay".to_string(),
        amount: rng.gen_range(1..=2000),
        payment_dt: now.timestamp(),
        bank: "alpha".to_string(),
        delivery_cost: 1500,
        goods_total: 317,
        custom_fee: 0,
    };

    let item = Item {
        chrt_id: rng.gen_range(1..=9_999_999),
        track_number: track_number.clone(),
        price: rng.gen_range(100..2100),
        rid: random_letters(&mut rng, 21),
        name: random_letters(&mut rng, 8),
        sale: 30,
        size: "0".to_string(),
        total_price: 317,
        nm_id: rng.gen_range(1..=9_999_999),
        brand: random_letters(&mut rng, 13),
        status: 202,
    };

    Order {
        order_uid,
        track_number,
        entry: random_letters(&mut rng, 4),
        delivery,
        payment,
        items: vec![item],
        locale: "en".to_string(),
        internal_signature: String::new(),
        customer_id: "test".to_string(),
        delivery_service: "meest".to_string(),
        shard_key: "9".to_string(),
        sm_id: 99,
        date_created: Some(now),
        oof_shard: "1".to_string(),
    }
}
