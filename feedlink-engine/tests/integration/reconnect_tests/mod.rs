mod test_answerer_gives_up;
