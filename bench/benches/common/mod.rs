/// A large entry point body made of one well-typed block repeated.
pub fn big_program() -> String {
    const BLOCK: &str = "
        1 2 + copy 3 > if drop 'a' else drop \"some string\" swap drop end drop
        10 while copy 0 > do 1 - end drop
    ";
    BLOCK.repeat(2_000)
}
