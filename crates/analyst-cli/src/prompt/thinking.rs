use rand::seq::SliceRandom;

const THINKING_MESSAGES: &[&str] = &[
    "Pulling price history",
    "Reading the tape",
    "Checking the fundamentals",
    "Crunching moving averages",
    "Consulting the regime model",
    "Scanning the headlines",
    "Plotting Bollinger bands",
    "Weighing the signals",
    "Balancing the books",
    "Reconciling the numbers",
    "Squinting at candlesticks",
    "Cross-checking sources",
];

pub fn get_random_thinking_message() -> &'static str {
    THINKING_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(THINKING_MESSAGES[0])
}
