use std::collections::VecDeque;

use rstest::rstest;

use moray_core::common_tests::concurrent_queue_core_tests;
use moray_core::Queue;

#[test]
fn singleton_roundtrip() {
    let queue = Queue::with_capacity(16);
    concurrent_queue_core_tests::test_singleton(&queue);
}

#[test]
fn sequential_fifo() {
    let queue = Queue::with_capacity(16);
    concurrent_queue_core_tests::test_sequential_fifo(&queue, 5);
}

#[test]
fn pop_empty_is_not_an_error() {
    let queue = Queue::with_capacity(16);
    concurrent_queue_core_tests::test_pop_empty(&queue);
}

#[rstest]
#[case::tiny(4)]
#[case::typical(8)]
#[case::pool_smaller_than_load(16)]
fn interleaved_combinations(#[case] n: usize) {
    // A four-node pool forces growth and recycling inside the grid.
    //
    concurrent_queue_core_tests::test_interleaved_combinations(|| Queue::with_capacity(4), n);
}

#[rstest]
#[case::exact_fit(0)]
#[case::one_over(1)]
#[case::many_over(16)]
fn exceeding_initial_capacity_keeps_fifo_order(#[case] excess: usize) {
    let initial = 32;
    let queue = Queue::with_capacity(initial);
    let total = queue.capacity() + excess;

    for id in 0..total {
        queue.push(id);
    }
    for id in 0..total {
        assert_eq!(queue.pop(), Some(id));
    }

    assert!(queue.capacity() >= initial + excess);
    assert!(queue.is_empty());
}

#[test]
fn random_interleaving_matches_a_model_queue() {
    let queue = Queue::with_capacity(8);
    let mut model: VecDeque<usize> = VecDeque::new();
    let mut next_id = 0;

    for _ in 0..10_000 {
        if rand::random::<u32>() % 100 < 55 {
            queue.push(next_id);
            model.push_back(next_id);
            next_id += 1;
        } else {
            assert_eq!(queue.pop(), model.pop_front());
        }
    }

    while let Some(expected) = model.pop_front() {
        assert_eq!(queue.pop(), Some(expected));
    }
    assert!(queue.is_empty());
}

#[test]
fn tag_wrap_around_preserves_order() {
    // Every push/pop pair bumps the head, tail and next tags; cycling well
    // past the 16-bit tag space must not disturb FIFO behavior.
    //
    let queue = Queue::with_capacity(4);
    for round in 0..70_000usize {
        queue.push(round);
        queue.push(round + 1);
        assert_eq!(queue.pop(), Some(round));
        assert_eq!(queue.pop(), Some(round + 1));
    }
    assert!(queue.is_empty());
    assert_eq!(queue.capacity(), 4);
}
