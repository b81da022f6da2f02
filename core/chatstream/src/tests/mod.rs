//! セッション全体を通したシナリオテストと性質テスト

mod support;

mod property_tests;
