fn main() {
    crackmate_lib::run()
}
