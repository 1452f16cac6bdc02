fn main() {
    // ESP-IDF link arguments are only needed for the firmware binary; host
    // builds (tests, fuzzing) skip the toolchain probe entirely.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
