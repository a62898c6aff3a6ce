#[cfg(test)]
mod arbitrage;
