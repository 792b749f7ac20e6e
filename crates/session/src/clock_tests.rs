use super::*;

fn blitz() -> ChessClock {
    ChessClock::new(TimeControl::new(3, 2))
}

#[test]
fn test_new_clock_is_stopped() {
    let clock = blitz();
    assert!(clock.enabled);
    assert!(!clock.is_running());
    assert_eq!(clock.remaining_time(Color::White), Duration::from_secs(180));
    assert_eq!(clock.remaining_time(Color::Black), Duration::from_secs(180));
}

#[test]
fn test_tick_charges_only_running_side() {
    let mut clock = blitz();
    assert_eq!(clock.tick(Duration::from_secs(5)), None);
    assert_eq!(clock.remaining_time(Color::White), Duration::from_secs(180));

    clock.start(Color::White);
    clock.tick(Duration::from_millis(1500));
    assert_eq!(clock.remaining_time(Color::White), Duration::from_millis(178_500));
    assert_eq!(clock.remaining_time(Color::Black), Duration::from_secs(180));
}

#[test]
fn test_flag_falls_exactly_once() {
    let mut clock = blitz();
    clock.start(Color::Black);
    assert_eq!(clock.tick(Duration::from_secs(179)), None);
    assert_eq!(clock.tick(Duration::from_secs(10)), Some(Color::Black));
    assert_eq!(clock.remaining_time(Color::Black), Duration::ZERO);
    assert!(clock.is_flagged(Color::Black));
    assert_eq!(clock.tick(Duration::from_secs(10)), None);
    assert_eq!(clock.remaining_time(Color::Black), Duration::ZERO);
}

#[test]
fn test_increment_not_added_after_flag() {
    let mut clock = blitz();
    clock.add_increment(Color::White);
    assert_eq!(clock.remaining_time(Color::White), Duration::from_secs(182));

    clock.start(Color::White);
    clock.tick(Duration::from_secs(500));
    clock.add_increment(Color::White);
    assert_eq!(clock.remaining_time(Color::White), Duration::ZERO);
}

#[test]
fn test_pause_stops_charging() {
    let mut clock = blitz();
    clock.start(Color::White);
    clock.pause();
    assert_eq!(clock.tick(Duration::from_secs(500)), None);
    assert_eq!(clock.remaining_time(Color::White), Duration::from_secs(180));
}

#[test]
fn test_unlimited_clock_never_runs() {
    let mut clock = ChessClock::new(TimeControl::unlimited());
    assert!(!clock.enabled);
    clock.start(Color::White);
    assert!(!clock.is_running());
    assert_eq!(clock.tick(Duration::from_secs(3600)), None);
    assert!(!clock.is_flagged(Color::White));
}

#[test]
fn test_format_time() {
    assert_eq!(ChessClock::format_time(Duration::from_secs(185)), "3:05");
    assert_eq!(ChessClock::format_time(Duration::from_millis(9_450)), "0:09.4");
}
