fn main() {
    vigil::run();
}
