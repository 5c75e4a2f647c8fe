fn main() {
    #[cfg(not(any(feature = "bincode", feature = "messagepack")))]
    compile_error!("sessionstore requires either the 'bincode' or the 'messagepack' feature");
}
