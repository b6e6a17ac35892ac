//! Throughput benchmark for price-time priority matching.
//!
//! Fills one side of the book with many price levels, then measures how fast a stream of
//! marketable orders can walk through them.

use backtest_execution::{MatchingAlgorithm, OrderBook};
use backtest_markets::{InstrumentId, Order, OrderId, OrderType, Side, StrategyId, Timestamp};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use rust_decimal::Decimal;

fn seeded_book(levels: u64) -> OrderBook {
    let mut book = OrderBook::new(InstrumentId::new("BENCH"), MatchingAlgorithm::PriceTime);
    for level in 0..levels {
        book.add(Side::Sell, Decimal::from(100 + level), OrderId(level), 10);
    }
    book
}

fn bench_match_market(c: &mut Criterion) {
    let mut group = c.benchmark_group("order_book_match_market");

    for &levels in &[100u64, 1_000] {
        group.throughput(Throughput::Elements(levels));
        group.bench_function(format!("levels_{levels}"), |b| {
            b.iter_batched(
                || {
                    let book = seeded_book(levels);
                    let order = Order::new(
                        OrderId(u64::MAX),
                        Timestamp::ZERO,
                        InstrumentId::new("BENCH"),
                        StrategyId::new("bench"),
                        Side::Buy,
                        OrderType::Market,
                        levels * 10,
                        None,
                        None,
                    );
                    (book, order)
                },
                |(mut book, order)| {
                    black_box(book.match_market(&order, Timestamp::ZERO).unwrap());
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_match_market);
criterion_main!(benches);
