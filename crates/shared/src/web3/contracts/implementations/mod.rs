pub mod prediction_market_contract;
