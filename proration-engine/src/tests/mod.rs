mod proptest_quotes;
